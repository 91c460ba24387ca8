//! Structure tags recognized by the record decoder.

/// Graph structures
pub const NODE_TAG: u8 = 0x4E; // 'N'
pub const RELATIONSHIP_TAG: u8 = 0x52; // 'R'
pub const UNBOUND_RELATIONSHIP_TAG: u8 = 0x72; // 'r'
pub const PATH_TAG: u8 = 0x50; // 'P'

/// Temporal structures
pub const DATE_TAG: u8 = 0x44; // 'D'
pub const DATE_TIME_TAG: u8 = 0x46; // 'F' (with offset)
pub const LOCAL_DATE_TIME_TAG: u8 = 0x64; // 'd'

/// Field counts for the graph structures.
pub const NODE_ARITY: usize = 3;
pub const RELATIONSHIP_ARITY: usize = 5;
pub const UNBOUND_RELATIONSHIP_ARITY: usize = 3;
pub const PATH_ARITY: usize = 3;
