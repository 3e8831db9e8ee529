//! Named builtin layouts: which builtins a run makes
//! available, in which order their segments are allocated, and at what instance ratio.
//!
//! A compiled program declares the builtins it needs; the runner rejects it unless every one
//! of them is present in the selected layout. A layout's own ratio always wins over whatever
//! a builtin runner would otherwise default to.

use crate::builtin::BuiltinName;

/// One builtin slot in a layout: its name and instance ratio (`None` for `output`, which has
/// no ratio, and for dynamic-ratio layouts).
#[derive(Debug, Clone, Copy)]
pub struct BuiltinSlot {
    pub name: BuiltinName,
    pub ratio: Option<u32>,
}

/// A named set of builtins, in the fixed order their segments are allocated.
#[derive(Debug, Clone, Copy)]
pub struct LayoutDefinition {
    pub name: &'static str,
    pub builtins: &'static [BuiltinSlot],
}

const fn slot(name: BuiltinName, ratio: Option<u32>) -> BuiltinSlot {
    BuiltinSlot { name, ratio }
}

const PLAIN: LayoutDefinition = LayoutDefinition {
    name: "plain",
    builtins: &[],
};

const SMALL: LayoutDefinition = LayoutDefinition {
    name: "small",
    builtins: &[
        slot("output", None),
        slot("pedersen", Some(8)),
        slot("range_check", Some(8)),
        slot("ecdsa", Some(512)),
    ],
};

const DEX: LayoutDefinition = LayoutDefinition {
    name: "dex",
    builtins: &[
        slot("output", None),
        slot("pedersen", Some(8)),
        slot("range_check", Some(8)),
        slot("ecdsa", Some(512)),
        slot("bitwise", Some(256)),
    ],
};

const RECURSIVE: LayoutDefinition = LayoutDefinition {
    name: "recursive",
    builtins: &[
        slot("output", None),
        slot("pedersen", Some(128)),
        slot("range_check", Some(8)),
        slot("bitwise", Some(8)),
    ],
};

const STARKNET: LayoutDefinition = LayoutDefinition {
    name: "starknet",
    builtins: &[
        slot("output", None),
        slot("pedersen", Some(32)),
        slot("range_check", Some(16)),
        slot("ecdsa", Some(2048)),
        slot("bitwise", Some(64)),
        slot("ec_op", Some(1024)),
        slot("poseidon", Some(32)),
        slot("segment_arena", None),
    ],
};

const STARKNET_WITH_KECCAK: LayoutDefinition = LayoutDefinition {
    name: "starknet_with_keccak",
    builtins: &[
        slot("output", None),
        slot("pedersen", Some(32)),
        slot("range_check", Some(16)),
        slot("ecdsa", Some(2048)),
        slot("bitwise", Some(64)),
        slot("ec_op", Some(1024)),
        slot("keccak", Some(2048)),
        slot("poseidon", Some(32)),
        slot("segment_arena", None),
    ],
};

const RECURSIVE_LARGE_OUTPUT: LayoutDefinition = LayoutDefinition {
    name: "recursive_large_output",
    builtins: &[
        slot("output", None),
        slot("pedersen", Some(128)),
        slot("range_check", Some(8)),
        slot("bitwise", Some(8)),
        slot("poseidon", Some(8)),
    ],
};

const ALL_CAIRO: LayoutDefinition = LayoutDefinition {
    name: "all_cairo",
    builtins: &[
        slot("output", None),
        slot("pedersen", Some(256)),
        slot("range_check", Some(8)),
        slot("ecdsa", Some(2048)),
        slot("bitwise", Some(16)),
        slot("ec_op", Some(1024)),
        slot("keccak", Some(2048)),
        slot("poseidon", Some(256)),
        slot("segment_arena", None),
    ],
};

/// Every builtin layout known to this crate, in no particular order.
pub const ALL_LAYOUTS: &[LayoutDefinition] = &[
    PLAIN,
    SMALL,
    DEX,
    RECURSIVE,
    STARKNET,
    STARKNET_WITH_KECCAK,
    RECURSIVE_LARGE_OUTPUT,
    ALL_CAIRO,
];

/// Looks up a layout by name, as provided on the command line.
pub fn lookup(name: &str) -> Option<LayoutDefinition> {
    ALL_LAYOUTS.iter().copied().find(|l| l.name == name)
}

impl LayoutDefinition {
    pub fn builtin_ratio(&self, name: &str) -> Option<Option<u32>> {
        self.builtins
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| slot.ratio)
    }

    pub fn has_builtin(&self, name: &str) -> bool {
        self.builtins.iter().any(|slot| slot.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_layout_has_no_builtins() {
        assert!(lookup("plain").unwrap().builtins.is_empty());
    }

    #[test]
    fn starknet_with_keccak_includes_keccak_and_starknet_does_not() {
        assert!(lookup("starknet_with_keccak").unwrap().has_builtin("keccak"));
        assert!(!lookup("starknet").unwrap().has_builtin("keccak"));
    }

    #[test]
    fn unknown_layout_name_is_none() {
        assert!(lookup("not_a_layout").is_none());
    }

    #[test]
    fn layout_ratio_wins_over_any_builtin_default() {
        let ratio = lookup("small").unwrap().builtin_ratio("pedersen").unwrap();
        assert_eq!(ratio, Some(8));
    }
}
