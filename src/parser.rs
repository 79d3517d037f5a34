use std::collections::HashSet;

use anyhow::{Context, Result, bail};

use crate::ir::{Block, IonDocument};

/// Parse and validate an Ion JSON document. Structural problems that would
/// make every downstream pass meaningless (duplicate block ids, edges to
/// unknown blocks) are rejected here; semantic problems (loop shape) are the
/// layout engine's to report per pass.
pub fn parse_ion(input: &str) -> Result<IonDocument> {
    let document: IonDocument =
        serde_json::from_str(input).context("parsing Ion JSON document")?;

    for function in &document.functions {
        for pass in &function.passes {
            validate_blocks(&pass.mir.blocks)
                .with_context(|| format!("function {:?}, pass {:?} (mir)", function.name, pass.name))?;
            validate_blocks(&pass.lir.blocks)
                .with_context(|| format!("function {:?}, pass {:?} (lir)", function.name, pass.name))?;
        }
    }

    Ok(document)
}

fn validate_blocks(blocks: &[Block]) -> Result<()> {
    let mut ids = HashSet::with_capacity(blocks.len());
    for block in blocks {
        if !ids.insert(block.id) {
            bail!("duplicate block id {}", block.id);
        }
    }
    for block in blocks {
        for pred in &block.predecessors {
            if !ids.contains(pred) {
                bail!("block {} lists unknown predecessor {}", block.id, pred);
            }
        }
        for succ in &block.successors {
            if !ids.contains(succ) {
                bail!("block {} lists unknown successor {}", block.id, succ);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_document() {
        let input = r#"{
            "functions": [{
                "name": "f",
                "passes": [{
                    "name": "BuildSSA",
                    "mir": {"blocks": [
                        {"id": 0, "number": 0, "loopDepth": 0, "attributes": [],
                         "predecessors": [], "successors": [1],
                         "instructions": [{"id": 1, "opcode": "start"}]},
                        {"id": 1, "number": 1, "loopDepth": 0, "attributes": [],
                         "predecessors": [0], "successors": [], "instructions": []}
                    ]},
                    "lir": {"blocks": []}
                }]
            }]
        }"#;
        let document = parse_ion(input).unwrap();
        assert_eq!(document.functions.len(), 1);
        let pass = &document.functions[0].passes[0];
        assert_eq!(pass.mir.blocks.len(), 2);
        assert_eq!(pass.mir.blocks[0].successors.len(), 1);
        assert_eq!(pass.mir.blocks[0].instructions[0].opcode, "start");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let input = r#"{
            "functions": [{
                "name": "f",
                "osr": true,
                "passes": [{"name": "p", "mir": {"blocks": []}, "lir": {"blocks": []}}]
            }]
        }"#;
        assert!(parse_ion(input).is_ok());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let input = r#"{
            "functions": [{
                "name": "f",
                "passes": [{
                    "name": "p",
                    "mir": {"blocks": [
                        {"id": 0, "predecessors": [], "successors": []},
                        {"id": 0, "predecessors": [], "successors": []}
                    ]},
                    "lir": {"blocks": []}
                }]
            }]
        }"#;
        assert!(parse_ion(input).is_err());
    }

    #[test]
    fn dangling_successor_rejected() {
        let input = r#"{
            "functions": [{
                "name": "f",
                "passes": [{
                    "name": "p",
                    "mir": {"blocks": [
                        {"id": 0, "predecessors": [], "successors": [7]}
                    ]},
                    "lir": {"blocks": []}
                }]
            }]
        }"#;
        assert!(parse_ion(input).is_err());
    }
}
