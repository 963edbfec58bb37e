//! Small shared enums decoded out of single instruction bits.

/// Transfer quantity of a single data transfer.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum ReadWriteKind {
    /// 32 bits (or 16 in the halfword forms).
    #[default]
    Word,

    /// 8 bits.
    Byte,
}

impl From<bool> for ReadWriteKind {
    fn from(value: bool) -> Self {
        if value {
            Self::Byte
        } else {
            Self::Word
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LoadStoreKind {
    Store,
    Load,
}

impl From<bool> for LoadStoreKind {
    fn from(b: bool) -> Self {
        match b {
            false => Self::Store,
            true => Self::Load,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Indexing {
    /// Add the offset after the transfer.
    Post,

    /// Add the offset before the transfer.
    Pre,
}

impl From<bool> for Indexing {
    fn from(state: bool) -> Self {
        match state {
            false => Self::Post,
            true => Self::Pre,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Offsetting {
    /// Subtract the offset from the base.
    Down,

    /// Add the offset to the base.
    Up,
}

impl From<bool> for Offsetting {
    fn from(state: bool) -> Self {
        match state {
            false => Self::Down,
            true => Self::Up,
        }
    }
}
