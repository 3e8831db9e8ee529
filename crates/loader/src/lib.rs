//! The compiled-program JSON schema and its `serde` deserialization.
//!
//! This is explicitly *not* part of the deterministic core: the
//! core consumes a plain [`cairo_vm_core::runner::CairoProgram`] and knows nothing about JSON.
//! This crate's only job is turning the reference compiler's on-disk format into that shape,
//! rejecting anything whose `prime` field disagrees with the field the core operates over.

#![warn(missing_docs, missing_debug_implementations)]

use std::collections::HashMap;

use cairo_vm_core::hint::HintData;
use cairo_vm_core::relocatable::Relocatable;
use cairo_vm_core::runner::CairoProgram;
use cairo_vm_core::value::MaybeRelocatable;
use serde::Deserialize;
use starknet_types_core::felt::Felt;
use thiserror::Error;

/// Errors raised while loading a compiled program.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The document does not parse as the expected JSON schema.
    #[error("malformed program JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The program's `prime` field does not match the field the core operates over.
    #[error("program prime {found} does not match the Stark prime {expected}")]
    PrimeMismatch {
        /// The prime found in the program.
        found: String,
        /// The prime the core expects.
        expected: String,
    },
    /// A `data` cell is neither a bigint string nor a `"segment:offset"` relocatable.
    #[error("malformed data cell: {0:?}")]
    InvalidCell(String),
    /// A hint's `pc` key (e.g. `"123"`) did not parse as an offset.
    #[error("malformed hint program-counter key: {0:?}")]
    InvalidHintPc(String),
}

/// One entry of the program's `identifiers` map.
///
/// Only the fields the runner needs to resolve an entrypoint are modeled in full; everything
/// else (`members`, `decorators`, `cairo_type`, ...) round-trips as an opaque JSON value so a
/// program carrying them still loads.
#[derive(Debug, Clone, Deserialize)]
pub struct Identifier {
    /// The identifier's kind, e.g. `"function"`, `"label"`, `"const"`, `"struct"`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// The instruction offset a `"function"` or `"label"` identifier resolves to.
    pub pc: Option<usize>,
    /// A constant's value, present when `kind == "const"`.
    pub value: Option<serde_json::Value>,
    /// Anything else the reference compiler attaches (`members`, `size`, `decorators`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One hint descriptor attached to a program-counter offset.
#[derive(Debug, Clone, Deserialize)]
pub struct HintParams {
    /// The hint's source code, in whatever language the compiler that produced it used.
    pub code: String,
    /// The scopes the hint is allowed to see, outermost first.
    #[serde(default)]
    pub accessible_scopes: Vec<String>,
    /// Flow-tracking metadata the reference compiler attaches for reference resolution;
    /// opaque to this crate.
    #[serde(default)]
    pub flow_tracking_data: serde_json::Value,
    /// Names of references the hint may read, resolved against `reference_manager`.
    #[serde(default)]
    pub reference_ids: HashMap<String, usize>,
}

/// One entry of the program's flat reference table.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceDescriptor {
    /// The defining expression, e.g. `"[cast(ap + (-1), felt)]"`.
    pub value: String,
    /// The program-counter offset from which this reference is valid.
    #[serde(default)]
    pub pc: usize,
}

/// The `reference_manager` section of a compiled program.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReferenceManager {
    /// The flat list of references every identifier's `references` field indexes into.
    #[serde(default)]
    pub references: Vec<ReferenceDescriptor>,
}

/// An attribute attached to a span of the compiled program (e.g. `with_attr` blocks); kept
/// opaque beyond its name, since the core has no use for attribute bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct Attribute {
    /// The attribute's name.
    pub name: String,
    /// Everything else the reference compiler records for it.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The on-disk shape of a compiled Cairo program.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramJson {
    /// Must equal the Stark prime; the loader rejects any program that disagrees.
    pub prime: String,
    /// The program's code and embedded constants, one string per cell.
    pub data: Vec<String>,
    /// The ordered list of builtins this program requires.
    #[serde(default)]
    pub builtins: Vec<String>,
    /// Name to identifier metadata, including every function/label's `pc`.
    #[serde(default)]
    pub identifiers: HashMap<String, Identifier>,
    /// Program-counter offset (as a decimal string key) to the hints attached there.
    #[serde(default)]
    pub hints: HashMap<String, Vec<HintParams>>,
    /// The fully-qualified name of the module containing `main`.
    #[serde(default)]
    pub main_scope: Option<String>,
    /// The flat reference table hints and debug info resolve `reference_ids` against.
    #[serde(default)]
    pub reference_manager: ReferenceManager,
    /// Source-span attributes (`with_attr` blocks and similar).
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Debug information (file/line mapping); opaque, kept only so it round-trips.
    #[serde(default)]
    pub debug_info: Option<serde_json::Value>,
}

/// The Stark prime, as the reference compiler renders it in a compiled program's `prime`
/// field (hex, `0x` prefixed).
pub const STARK_PRIME_HEX: &str = "0x800000000000011000000000000000000000000000000000000000000000001";

fn normalize_prime(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let digits = without_prefix.trim_start_matches('0');
    digits.to_ascii_lowercase()
}

/// Parses one `data` entry into a memory cell.
///
/// The reference compiler renders every cell as a decimal or `0x`-prefixed hex bigint string,
/// except relocatable constants (rare, produced by some hint-heavy programs), rendered as
/// `"segment:offset"`.
fn parse_cell(raw: &str) -> Result<MaybeRelocatable, LoaderError> {
    if let Some((segment, offset)) = raw.split_once(':') {
        let segment_index: isize = segment
            .parse()
            .map_err(|_| LoaderError::InvalidCell(raw.to_owned()))?;
        let offset: usize = offset
            .parse()
            .map_err(|_| LoaderError::InvalidCell(raw.to_owned()))?;
        return Ok(MaybeRelocatable::from_relocatable(Relocatable::new(
            segment_index,
            offset,
        )));
    }

    let felt = if let Some(hex) = raw.strip_prefix("0x") {
        Felt::from_hex(&format!("0x{hex}")).map_err(|_| LoaderError::InvalidCell(raw.to_owned()))?
    } else {
        Felt::from_dec_str(raw).map_err(|_| LoaderError::InvalidCell(raw.to_owned()))?
    };
    Ok(MaybeRelocatable::from_felt(felt))
}

/// Parses `source` as a compiled program and converts it into the shape
/// [`cairo_vm_core::runner::CairoRunner`] consumes.
///
/// Rejects any program whose `prime` disagrees with the field the core operates over.
pub fn load_program(source: &str) -> Result<CairoProgram, LoaderError> {
    let program: ProgramJson = serde_json::from_str(source)?;

    let found = normalize_prime(&program.prime);
    let expected = normalize_prime(STARK_PRIME_HEX);
    if found != expected {
        return Err(LoaderError::PrimeMismatch {
            found: program.prime,
            expected: STARK_PRIME_HEX.to_owned(),
        });
    }

    let data = program
        .data
        .iter()
        .map(|raw| parse_cell(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut hints: HashMap<usize, Vec<HintData>> = HashMap::new();
    for (pc, params) in &program.hints {
        let offset: usize = pc
            .parse()
            .map_err(|_| LoaderError::InvalidHintPc(pc.clone()))?;
        let entries = params
            .iter()
            .map(|p| HintData {
                code: p.code.clone(),
                reference_ids: p.reference_ids.values().copied().collect(),
            })
            .collect();
        hints.insert(offset, entries);
    }

    let entrypoints = program
        .identifiers
        .iter()
        .filter_map(|(name, id)| {
            if id.kind.as_deref() == Some("function") {
                id.pc.map(|pc| (entrypoint_name(name), pc))
            } else {
                None
            }
        })
        .collect();

    Ok(CairoProgram {
        data,
        builtins: program.builtins,
        hints,
        entrypoints,
    })
}

/// Strips the module path from a fully-qualified identifier name, so `"__main__.main"` and
/// `"some.module.main"` both resolve under the short name `"main"` the CLI's `--entrypoint`
/// flag expects.
fn entrypoint_name(qualified: &str) -> String {
    qualified.rsplit('.').next().unwrap_or(qualified).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(prime: &str) -> String {
        format!(
            r#"{{
                "prime": "{prime}",
                "data": ["0x480680017fff8000", "0x2", "0x208b7fff7fff7ffe"],
                "builtins": [],
                "identifiers": {{
                    "__main__.main": {{"type": "function", "pc": 0, "decorators": []}}
                }},
                "hints": {{}},
                "main_scope": "__main__",
                "reference_manager": {{"references": []}},
                "attributes": []
            }}"#
        )
    }

    #[test]
    fn loads_a_well_formed_program() {
        let program = load_program(&sample_json(STARK_PRIME_HEX)).unwrap();
        assert_eq!(program.data.len(), 3);
        assert_eq!(program.entrypoints.get("main"), Some(&0));
    }

    #[test]
    fn rejects_a_mismatched_prime() {
        let err = load_program(&sample_json("0x1")).unwrap_err();
        assert!(matches!(err, LoaderError::PrimeMismatch { .. }));
    }

    #[test]
    fn accepts_decimal_and_hex_cells_interchangeably() {
        let hex = parse_cell("0x10").unwrap();
        let dec = parse_cell("16").unwrap();
        assert_eq!(hex, dec);
    }

    #[test]
    fn rejects_a_malformed_cell() {
        assert!(parse_cell("not-a-number").is_err());
    }

    #[test]
    fn parses_relocatable_cells() {
        let cell = parse_cell("2:5").unwrap();
        assert_eq!(cell, MaybeRelocatable::from_relocatable(Relocatable::new(2, 5)));
    }

    #[test]
    fn qualified_entrypoint_names_resolve_to_their_short_form() {
        assert_eq!(entrypoint_name("__main__.main"), "main");
        assert_eq!(entrypoint_name("main"), "main");
    }

    #[test]
    fn hint_pc_keys_are_parsed_as_offsets() {
        let json = r#"{
            "prime": "0x800000000000011000000000000000000000000000000000000000000000001",
            "data": ["1"],
            "builtins": [],
            "identifiers": {},
            "hints": {"3": [{"code": "memory[ap] = 1", "accessible_scopes": [], "flow_tracking_data": {}, "reference_ids": {}}]},
            "main_scope": "__main__",
            "reference_manager": {"references": []},
            "attributes": []
        }"#;
        let program = load_program(json).unwrap();
        assert_eq!(program.hints.get(&3).map(Vec::len), Some(1));
    }
}
