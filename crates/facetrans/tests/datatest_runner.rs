//! Runs every `tests/desugar_cases/*.py` through the pass and compares the printed result
//! with the sibling `.expected` file.
//!
//! A case whose first line is `# whole-module` is rewritten with `marker = None`; all
//! others use the default `@jeeves` marker. A failing rewrite is compared as
//! `error: <message>`.

use std::{fs, path::Path};

use facetrans::{DesugarOptions, desugar_source};
use similar::TextDiff;

fn run_case(path: &Path) -> datatest_stable::Result<()> {
    let code = fs::read_to_string(path)?;
    let expected_path = path.with_extension("expected");
    let expected = fs::read_to_string(&expected_path)
        .map_err(|e| format!("cannot read {}: {e}", expected_path.display()))?;

    let options = if code.starts_with("# whole-module") {
        DesugarOptions::whole_module()
    } else {
        DesugarOptions::default()
    };
    let actual = match desugar_source(&code, &options) {
        Ok(desugared) => desugared.to_source(),
        Err(err) => format!("error: {err}\n"),
    };

    if actual != expected {
        let diff = TextDiff::from_lines(&expected, &actual);
        let diff = diff
            .unified_diff()
            .context_radius(3)
            .header("expected", "actual")
            .to_string();
        return Err(format!("output mismatch for {}:\n{diff}", path.display()).into());
    }
    Ok(())
}

datatest_stable::harness!(run_case, "tests/desugar_cases", r"^.*\.py$");
