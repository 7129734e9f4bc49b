// provenance.rs — Build provenance for hermetic output tracking
//
// Computes SHA-256 hashes of the raw source text and of a canonical module
// summary so downstream build systems can key caches on compiler inputs
// rather than on generated output.
//
// Preconditions: none.
// Postconditions: hashes depend only on source text and module structure.
// Failure modes: none (pure computation).
// Side effects: none.

use crate::diag::{DiagLevel, Diagnostic};
use crate::ir::{Bound, ConstValue, Module, OpKind, Region};

/// Provenance metadata for hermetic builds and cache-key use.
///
/// `source_hash`: SHA-256 of the raw source text.
/// `module_fingerprint`: SHA-256 of canonical compact JSON from
/// `canonical_module_json` (structure and payloads, no value identifiers).
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub module_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the module fingerprint (64 characters).
    pub fn module_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.module_fingerprint)
    }

    /// Serialize provenance as a JSON string for build-info output.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"module_fingerprint\": \"{}\",\n  \"build_info_schema_version\": 1,\n  \"compiler_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.module_fingerprint_hex(),
            self.compiler_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from source text and the lowered module.
///
/// Uses SHA-256 for both hashes. The module fingerprint is computed from
/// `canonical_module_json` (compact JSON, no whitespace) so it is stable
/// across runs and independent of value numbering.
pub fn compute_provenance(source: &str, module: &Module) -> Provenance {
    use sha2::{Digest, Sha256};

    let source_hash = {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    let module_fingerprint = {
        let canonical = canonical_module_json(module);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    Provenance {
        source_hash,
        module_fingerprint,
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

/// Canonical compact JSON describing module structure: function names in
/// definition order, argument counts, and nested operations as
/// `[kind, operands, results]` triples.
pub fn canonical_module_json(module: &Module) -> String {
    use serde_json::json;

    let mut funcs = Vec::new();
    for func in &module.funcs {
        let mut ops = Vec::new();
        walk_region(module, &func.body, &mut ops);
        let args: Vec<String> = func
            .body
            .blocks
            .first()
            .map(|b| b.args.iter().map(|&a| module.value(a).ty.to_string()).collect())
            .unwrap_or_default();
        funcs.push(json!({
            "name": func.name,
            "args": args,
            "ops": ops,
        }));
    }
    json!({
        "values": module.value_count(),
        "funcs": funcs,
    })
    .to_string()
}

fn walk_region(module: &Module, region: &Region, out: &mut Vec<serde_json::Value>) {
    use serde_json::json;

    for block in &region.blocks {
        for &id in &block.ops {
            let op = module.op(id);
            // Payload-carrying kinds serialize the payload too, so graphs
            // that differ only in a constant or a bound never collide.
            let entry = match &op.kind {
                OpKind::Constant(value) => json!(["constant", const_token(*value)]),
                OpKind::AffineFor { lower, upper, step } => {
                    json!(["affine_for", bound_token(*lower), bound_token(*upper), *step])
                }
                kind => json!([kind.name(), op.operands.len(), op.results.len()]),
            };
            out.push(entry);
            for nested in &op.regions {
                walk_region(module, nested, out);
            }
        }
    }
}

fn const_token(value: ConstValue) -> String {
    match value {
        ConstValue::Float(v) => format!("f:{}", v),
        ConstValue::Int(v) => format!("i:{}", v),
        ConstValue::Bool(v) => format!("b:{}", v),
    }
}

fn bound_token(bound: Bound) -> String {
    match bound {
        Bound::Const(v) => v.to_string(),
        Bound::Dynamic => "dyn".into(),
    }
}

/// Full build-info document: provenance plus the diagnostics the build
/// produced, with error and warning counts broken out.
pub fn build_info_json(provenance: &Provenance, diagnostics: &[Diagnostic]) -> String {
    use serde_json::json;

    let errors = diagnostics
        .iter()
        .filter(|d| d.level == DiagLevel::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level == DiagLevel::Warning)
        .count();
    let doc = json!({
        "source_hash": provenance.source_hash_hex(),
        "module_fingerprint": provenance.module_fingerprint_hex(),
        "build_info_schema_version": 1,
        "compiler_version": provenance.compiler_version,
        "errors": errors,
        "warnings": warnings,
        "diagnostics": diagnostics,
    });
    serde_json::to_string_pretty(&doc).expect("build info serialization cannot fail")
}
