use bitflags::bitflags;

bitflags! {
    /// Represents the bitwise flags for an OP_QUERY.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct QueryFlags: u32 {
        const TAILABLE_CURSOR   = 0b_0000_0000_0000_0000_0000_0000_0000_0010;
        const SECONDARY_OK      = 0b_0000_0000_0000_0000_0000_0000_0000_0100;
        const OPLOG_REPLAY      = 0b_0000_0000_0000_0000_0000_0000_0000_1000;
        const NO_CURSOR_TIMEOUT = 0b_0000_0000_0000_0000_0000_0000_0001_0000;
        const AWAIT_DATA        = 0b_0000_0000_0000_0000_0000_0000_0010_0000;
        const EXHAUST           = 0b_0000_0000_0000_0000_0000_0000_0100_0000;
        const PARTIAL           = 0b_0000_0000_0000_0000_0000_0000_1000_0000;
    }
}
