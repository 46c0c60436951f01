/// Standard DLM lock modes, weakest to strongest.
///
/// `Nl` (null) is a placeholder compatible with everything; `Cr`/`Cw` are the
/// concurrent read/write modes; `Pr`/`Pw` are protected read/write; `Ex` is
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockMode {
    Nl,
    Cr,
    Cw,
    Pr,
    Pw,
    Ex,
}

// one row per mode, bit i set when the row's mode coexists with mode i
const COMPAT: [u8; 6] = [
    0b111111, // NL
    0b011111, // CR
    0b000111, // CW
    0b001011, // PR
    0b000011, // PW
    0b000001, // EX
];

impl LockMode {
    pub const ALL: [LockMode; 6] = [
        LockMode::Nl,
        LockMode::Cr,
        LockMode::Cw,
        LockMode::Pr,
        LockMode::Pw,
        LockMode::Ex,
    ];

    fn bit(self) -> u8 {
        1 << self as u8
    }

    pub fn compatible(self, other: LockMode) -> bool {
        COMPAT[self as usize] & other.bit() != 0
    }

    /// Modes whose holders can change file contents; their extent locks are
    /// the ones a glimpse has to consult.
    pub fn is_write(self) -> bool {
        matches!(self, LockMode::Pw | LockMode::Ex)
    }
}
impl Default for LockMode {
    fn default() -> Self {
        LockMode::Nl
    }
}
impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = match self {
            LockMode::Nl => "NL",
            LockMode::Cr => "CR",
            LockMode::Cw => "CW",
            LockMode::Pr => "PR",
            LockMode::Pw => "PW",
            LockMode::Ex => "EX",
        };
        write!(f, "{}", show)
    }
}
