use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable block identifier from the Ion JSON document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrKind {
    Mir,
    Lir,
}

impl IrKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "mir" | "MIR" => Some(Self::Mir),
            "lir" | "LIR" => Some(Self::Lir),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IonDocument {
    #[serde(default)]
    pub functions: Vec<IonFunction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IonFunction {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub passes: Vec<Pass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pass {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mir: BlockList,
    #[serde(default)]
    pub lir: BlockList,
}

impl Pass {
    pub fn blocks(&self, kind: IrKind) -> &[Block] {
        match kind {
            IrKind::Mir => &self.mir.blocks,
            IrKind::Lir => &self.lir.blocks,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockList {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// One basic block of a pass. `instructions` is opaque to the layout core;
/// only the renderer and the text measurer look at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub loop_depth: u32,
    #[serde(default)]
    pub predecessors: Vec<BlockId>,
    #[serde(default)]
    pub successors: Vec<BlockId>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    pub fn is_loop_header(&self) -> bool {
        self.has_attribute("loopheader")
    }

    pub fn is_backedge(&self) -> bool {
        self.has_attribute("backedge")
    }

    pub fn is_split_edge(&self) -> bool {
        self.has_attribute("splitedge")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub opcode: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<u32>,
    #[serde(default)]
    pub uses: Vec<u32>,
    #[serde(default)]
    pub mem_inputs: Vec<u32>,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
}
