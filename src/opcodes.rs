//! Opcode values for the 1.12 protocol revision.

/// Server → client.
pub mod smsg {
    pub const NEW_WORLD: u16 = 0x03E;
    pub const UPDATE_OBJECT: u16 = 0x0A9;
    pub const DESTROY_OBJECT: u16 = 0x0AA;
    pub const INITIAL_SPELLS: u16 = 0x12A;
    pub const LEARNED_SPELL: u16 = 0x12B;
    pub const CAST_FAILED: u16 = 0x130;
    pub const SPELL_START: u16 = 0x131;
    pub const SPELL_GO: u16 = 0x132;
    pub const SPELL_FAILURE: u16 = 0x133;
    pub const ATTACKSTART: u16 = 0x143;
    pub const ATTACKSTOP: u16 = 0x144;
    pub const ATTACKERSTATEUPDATE: u16 = 0x14A;
    pub const LOG_XPGAIN: u16 = 0x1D0;
    pub const LEVELUP_INFO: u16 = 0x1D4;
    pub const COMPRESSED_UPDATE_OBJECT: u16 = 0x1F6;
    pub const LOGIN_VERIFY_WORLD: u16 = 0x236;
    pub const SPELLLOGMISS: u16 = 0x24B;
    pub const SPELL_FAILED_OTHER: u16 = 0x2A6;
}

/// Client → server.
pub mod cmsg {
    pub const GAMEOBJ_USE: u32 = 0x0B1;
    pub const ATTACKSWING: u32 = 0x141;
    pub const ATTACKSTOP: u32 = 0x142;
    pub const LOOT: u32 = 0x15D;
    pub const LOOT_RELEASE: u32 = 0x15F;
}
