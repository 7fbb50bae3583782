//! Push protocol constants: device return codes, operation-log codes,
//! alarm reasons and language codes.

/// Return codes a device reports in command responses and enrollment
/// results (vendor appendix 1).
pub mod return_code {
    pub const SUCCESS: i32 = 1;
    pub const FINGERPRINT_EXISTS: i32 = 2;
    pub const FINGERPRINT_ENROLLMENT_FAILED: i32 = 4;
    pub const FINGERPRINT_EXISTS_IN_DATABASE: i32 = 5;
    pub const FINGERPRINT_ENROLLMENT_CANCELED: i32 = 6;
    pub const FINGERPRINT_ENROLLMENT_DEVICE_BUSY: i32 = 7;

    pub const PARAMETER_INCORRECT: i32 = -1;
    pub const USER_PHOTO_SIZE_MISMATCH: i32 = -2;
    pub const READ_WRITE_INCORRECT: i32 = -3;
    pub const TEMPLATE_SIZE_MISMATCH: i32 = -9;
    pub const USER_PIN_NOT_FOUND: i32 = -10;
    pub const ILLEGAL_FINGERPRINT_FORMAT: i32 = -11;
    pub const ILLEGAL_FINGERPRINT_TEMPLATE: i32 = -12;

    pub const LIMITED_CAPACITY: i32 = -1001;
    pub const NOT_SUPPORTED: i32 = -1002;
    pub const COMMAND_TIMEOUT: i32 = -1003;
    pub const INCONSISTENT_CONFIGURATION: i32 = -1004;
    pub const EQUIPMENT_BUSY: i32 = -1005;
    pub const DATA_TOO_LONG: i32 = -1006;
    pub const MEMORY_ERROR: i32 = -1007;
}

/// Operation-log entry codes (vendor appendix 3).
pub mod oplog {
    pub const STARTUP: u16 = 0;
    pub const SHUTDOWN: u16 = 1;
    pub const AUTHENTICATION_FAILS: u16 = 2;
    pub const ALARM: u16 = 3;
    pub const ACCESS_MENU: u16 = 4;
    pub const CHANGE_SETTINGS: u16 = 5;
    pub const ENROLL_FINGERPRINT: u16 = 6;
    pub const ENROLL_PASSWORD: u16 = 7;
    pub const ENROLL_HID_CARD: u16 = 8;
    pub const DELETE_USER: u16 = 9;
    pub const DELETE_FINGERPRINT: u16 = 10;
    pub const DELETE_PASSWORD: u16 = 11;
    pub const DELETE_RF_CARD: u16 = 12;
    pub const CLEAR_DATA: u16 = 13;
    pub const CREATE_MF_CARD: u16 = 14;
    pub const ENROLL_MF_CARD: u16 = 15;
    pub const REGISTER_MF_CARD: u16 = 16;
    pub const DELETE_MF_CARD: u16 = 17;
    pub const CLEAR_MF_CARD_CONTENT: u16 = 18;
    pub const MOVE_ENROLLED_DATA_INTO_CARD: u16 = 19;
    pub const COPY_CARD_DATA_TO_MACHINE: u16 = 20;
    pub const SET_TIME: u16 = 21;
    pub const DELIVERY_CONFIGURATION: u16 = 22;
    pub const DELETE_ENTRY_EXIT_RECORDS: u16 = 23;
    pub const CLEAR_ADMIN_PRIVILEGE: u16 = 24;
    pub const MODIFY_ACCESS_GROUP: u16 = 25;
    pub const MODIFY_USER_ACCESS: u16 = 26;
    pub const MODIFY_ACCESS_TIME_PERIOD: u16 = 27;
    pub const MODIFY_UNLOCK_COMBINATION: u16 = 28;
    pub const UNLOCK: u16 = 29;
    pub const ENROLL_NEW_USER: u16 = 30;
    pub const CHANGE_FINGERPRINT_ATTRIBUTE: u16 = 31;
    pub const DURESS_ALARM: u16 = 32;
}

/// Alarm reasons reported with alarm operation-log entries.
pub mod alarm {
    pub const DOOR_CLOSE_DETECTED: u16 = 50;
    pub const DOOR_OPEN_DETECTED: u16 = 51;
    pub const OUT_DOOR_BUTTON: u16 = 53;
    pub const DOOR_BROKEN: u16 = 54;
    pub const MACHINE_BROKEN: u16 = 55;
    pub const INVALID_VERIFICATION: u16 = 58;
    pub const CANCELLED: u16 = 65535;
}

/// Single-byte language codes a device reports on initial exchange.
pub mod lang {
    pub const CN: u8 = 83;
    pub const EN: u8 = 69;
    pub const ES: u8 = 97;
    pub const FR: u8 = 70;
    pub const AR: u8 = 66;
    pub const PT: u8 = 80;
    pub const RU: u8 = 82;
    pub const DE: u8 = 71;
    pub const FA: u8 = 65;
    pub const TH: u8 = 76;
    pub const ID: u8 = 73;
    pub const JA: u8 = 74;
    pub const KO: u8 = 75;
    pub const VI: u8 = 86;
    pub const TK: u8 = 116;
    pub const HE: u8 = 72;
    pub const CS: u8 = 90;
    pub const NL: u8 = 68;
    pub const IT: u8 = 105;
    pub const SK: u8 = 89;
    pub const EL: u8 = 103;
    pub const PL: u8 = 112;
    pub const TW: u8 = 84;
}

/// Human-readable name for a device language code.
pub fn language_name(code: u8) -> Option<&'static str> {
    Some(match code {
        lang::AR => "Arabic",
        lang::CS => "Czech",
        lang::DE => "German",
        lang::EL => "Greek",
        lang::EN => "English",
        lang::ES => "Spanish",
        lang::FR => "French",
        lang::HE => "Hebrew",
        lang::ID => "Indonesian",
        lang::IT => "Italian",
        lang::JA => "Japanese",
        lang::KO => "Korean",
        lang::NL => "Dutch",
        lang::PL => "Polish",
        lang::PT => "Portuguese",
        lang::RU => "Russian",
        lang::SK => "Slovak",
        lang::TH => "Thai",
        lang::TK => "Turkish",
        lang::TW => "Traditional Chinese",
        lang::VI => "Vietnamese",
        lang::CN => "Simplified Chinese",
        _ => return None,
    })
}
