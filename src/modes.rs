//! Runtime switches which change how the engine builds and keeps expressions.
//!
//! A single `Modes` is shared between the AST context, the symbolic state, the taint
//! state and the instruction semantics, so toggling a mode is visible to all of them
//! immediately.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Keep a cache of whole memory writes so that a read of the same address and size
    /// returns the written expression without rebuilding it from bytes.
    AlignedMemory,
    /// Apply algebraic identities while building nodes.
    AstOptimizations,
    /// Bind a fresh variable to registers an instruction leaves undefined.
    ConcretizeUndefinedRegisters,
    /// Fold nodes whose children are all constants.
    ConstantFolding,
    /// Model memory as a single array formula with `select`/`store` nodes.
    MemoryArray,
    /// Keep only expressions containing symbolic variables.
    OnlyOnSymbolized,
    /// Keep only expressions whose result is tainted.
    OnlyOnTainted,
    /// Record a path constraint only when the program counter formula is symbolic.
    PcTrackingSymbolic,
    /// Use the symbolic effective address as the array index of loads.
    SymbolizeLoad,
    /// Use the symbolic effective address as the array index of stores.
    SymbolizeStore,
    /// Keep symbolic rotation amounts instead of concretizing them.
    SymbolizeIndexRotation,
    /// Treat a memory access as tainted when its base or index register is tainted.
    TaintThroughPointers,
}

impl Mode {
    pub const ALL: [Mode; 12] = [
        Mode::AlignedMemory,
        Mode::AstOptimizations,
        Mode::ConcretizeUndefinedRegisters,
        Mode::ConstantFolding,
        Mode::MemoryArray,
        Mode::OnlyOnSymbolized,
        Mode::OnlyOnTainted,
        Mode::PcTrackingSymbolic,
        Mode::SymbolizeLoad,
        Mode::SymbolizeStore,
        Mode::SymbolizeIndexRotation,
        Mode::TaintThroughPointers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mode::AlignedMemory => "ALIGNED_MEMORY",
            Mode::AstOptimizations => "AST_OPTIMIZATIONS",
            Mode::ConcretizeUndefinedRegisters => "CONCRETIZE_UNDEFINED_REGISTERS",
            Mode::ConstantFolding => "CONSTANT_FOLDING",
            Mode::MemoryArray => "MEMORY_ARRAY",
            Mode::OnlyOnSymbolized => "ONLY_ON_SYMBOLIZED",
            Mode::OnlyOnTainted => "ONLY_ON_TAINTED",
            Mode::PcTrackingSymbolic => "PC_TRACKING_SYMBOLIC",
            Mode::SymbolizeLoad => "SYMBOLIZE_LOAD",
            Mode::SymbolizeStore => "SYMBOLIZE_STORE",
            Mode::SymbolizeIndexRotation => "SYMBOLIZE_INDEX_ROTATION",
            Mode::TaintThroughPointers => "TAINT_THROUGH_POINTERS",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Mode, Error> {
        Mode::ALL.iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownMode(s.into()))
    }
}

pub struct Modes {
    enabled: Cell<u16>,
}

pub type SharedModes = Rc<Modes>;

impl Modes {
    /// Default configuration: only `PC_TRACKING_SYMBOLIC` is enabled.
    pub fn new() -> Modes {
        let modes = Modes::empty();
        modes.enable(Mode::PcTrackingSymbolic);
        modes
    }

    pub fn empty() -> Modes {
        Modes {
            enabled: Cell::new(0),
        }
    }

    pub fn shared() -> SharedModes {
        Rc::new(Modes::new())
    }

    /// Parses a list of mode names (e.g. from a configuration file), enabling each of them
    /// on top of an empty set.
    pub fn from_names<'a, I>(names: I) -> Result<Modes, Error>
    where I: IntoIterator<Item = &'a str>,
    {
        let modes = Modes::empty();
        for name in names {
            modes.enable(name.parse()?);
        }
        Ok(modes)
    }

    #[inline]
    pub fn is_enabled(&self, mode: Mode) -> bool {
        self.enabled.get() & mode.bit() != 0
    }

    pub fn set(&self, mode: Mode, enabled: bool) {
        let old = self.enabled.get();
        let new = if enabled {
            old | mode.bit()
        } else {
            old & !mode.bit()
        };
        if old != new {
            debug!("Mode {} {}", mode, if enabled { "enabled" } else { "disabled" });
        }
        self.enabled.set(new);
    }

    pub fn enable(&self, mode: Mode) {
        self.set(mode, true)
    }

    pub fn disable(&self, mode: Mode) {
        self.set(mode, false)
    }

    pub fn enabled<'a>(&'a self) -> impl Iterator<Item = Mode> + 'a {
        Mode::ALL.iter().copied().filter(move |&m| self.is_enabled(m))
    }
}

impl Default for Modes {
    fn default() -> Modes {
        Modes::new()
    }
}

impl Clone for Modes {
    fn clone(&self) -> Modes {
        Modes {
            enabled: Cell::new(self.enabled.get()),
        }
    }
}

impl fmt::Debug for Modes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.enabled()).finish()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Mode, Modes};

    impl Serialize for Modes {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(self.enabled())
        }
    }

    impl<'de> Deserialize<'de> for Modes {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Modes, D::Error> {
            let list = Vec::<Mode>::deserialize(deserializer)?;
            let modes = Modes::empty();
            for mode in list {
                modes.enable(mode);
            }
            Ok(modes)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_modes() {
        let modes = Modes::new();
        assert!(modes.is_enabled(Mode::PcTrackingSymbolic));
        for &mode in Mode::ALL.iter().filter(|&&m| m != Mode::PcTrackingSymbolic) {
            assert!(!modes.is_enabled(mode), "{} enabled by default", mode);
        }
    }

    #[test]
    fn toggle_modes() {
        let modes = Modes::empty();
        modes.enable(Mode::ConstantFolding);
        modes.enable(Mode::AstOptimizations);
        assert!(modes.is_enabled(Mode::ConstantFolding));
        modes.disable(Mode::ConstantFolding);
        assert!(!modes.is_enabled(Mode::ConstantFolding));
        assert!(modes.is_enabled(Mode::AstOptimizations));
        assert_eq!(modes.enabled().collect::<Vec<_>>(), vec![Mode::AstOptimizations]);
    }

    #[test]
    fn parse_mode_names() {
        let modes = Modes::from_names(vec!["memory_array", "TAINT_THROUGH_POINTERS"]).unwrap();
        assert!(modes.is_enabled(Mode::MemoryArray));
        assert!(modes.is_enabled(Mode::TaintThroughPointers));
        assert!(!modes.is_enabled(Mode::PcTrackingSymbolic));
        match "NOT_A_MODE".parse::<Mode>() {
            Err(Error::UnknownMode(name)) => assert_eq!(name, "NOT_A_MODE"),
            x => panic!("Unexpected {:?}", x),
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_modes() {
        let modes = Modes::from_names(vec!["CONSTANT_FOLDING", "ONLY_ON_TAINTED"]).unwrap();
        let json = serde_json::to_string(&modes).unwrap();
        let back: Modes = serde_json::from_str(&json).unwrap();
        assert_eq!(back.enabled().collect::<Vec<_>>(), modes.enabled().collect::<Vec<_>>());
    }
}
