// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Expression (blend shape) table and per-frame expression weights.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The standard expression presets, named after VRM 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ExpressionPreset {
    Happy,
    Angry,
    Sad,
    Relaxed,
    Surprised,
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
    Blink,
    BlinkLeft,
    BlinkRight,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
    Neutral,
}

impl ExpressionPreset {
    /// Returns the VRM 1.0 expression name.
    pub fn name(self) -> &'static str {
        match self {
            ExpressionPreset::Happy => "happy",
            ExpressionPreset::Angry => "angry",
            ExpressionPreset::Sad => "sad",
            ExpressionPreset::Relaxed => "relaxed",
            ExpressionPreset::Surprised => "surprised",
            ExpressionPreset::Aa => "aa",
            ExpressionPreset::Ih => "ih",
            ExpressionPreset::Ou => "ou",
            ExpressionPreset::Ee => "ee",
            ExpressionPreset::Oh => "oh",
            ExpressionPreset::Blink => "blink",
            ExpressionPreset::BlinkLeft => "blinkLeft",
            ExpressionPreset::BlinkRight => "blinkRight",
            ExpressionPreset::LookUp => "lookUp",
            ExpressionPreset::LookDown => "lookDown",
            ExpressionPreset::LookLeft => "lookLeft",
            ExpressionPreset::LookRight => "lookRight",
            ExpressionPreset::Neutral => "neutral",
        }
    }

    /// Parses a VRM 1.0 preset key.
    pub fn from_vrm1(name: &str) -> Option<Self> {
        use ExpressionPreset::*;
        [
            Happy, Angry, Sad, Relaxed, Surprised, Aa, Ih, Ou, Ee, Oh, Blink, BlinkLeft,
            BlinkRight, LookUp, LookDown, LookLeft, LookRight, Neutral,
        ]
        .into_iter()
        .find(|preset| preset.name() == name)
    }

    /// Parses a VRM 0.x `presetName`, mapping it onto the 1.0 vocabulary.
    pub fn from_vrm0(name: &str) -> Option<Self> {
        let preset = match name.to_ascii_lowercase().as_str() {
            "a" => ExpressionPreset::Aa,
            "i" => ExpressionPreset::Ih,
            "u" => ExpressionPreset::Ou,
            "e" => ExpressionPreset::Ee,
            "o" => ExpressionPreset::Oh,
            "joy" => ExpressionPreset::Happy,
            "angry" => ExpressionPreset::Angry,
            "sorrow" => ExpressionPreset::Sad,
            "fun" => ExpressionPreset::Relaxed,
            "surprised" => ExpressionPreset::Surprised,
            "blink" => ExpressionPreset::Blink,
            "blink_l" => ExpressionPreset::BlinkLeft,
            "blink_r" => ExpressionPreset::BlinkRight,
            "lookup" => ExpressionPreset::LookUp,
            "lookdown" => ExpressionPreset::LookDown,
            "lookleft" => ExpressionPreset::LookLeft,
            "lookright" => ExpressionPreset::LookRight,
            "neutral" => ExpressionPreset::Neutral,
            _ => return None,
        };
        Some(preset)
    }
}

/// One morph target driven by an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphBind {
    /// Index into the avatar's mesh list.
    pub mesh: usize,
    /// Morph target index within that mesh.
    pub morph_index: usize,
    /// Weight of the morph at full expression, in `[0, 1]`.
    pub weight: f32,
}

/// A named facial expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Lookup name: the preset name for presets, the author's name otherwise.
    pub name: String,
    /// The preset this expression implements, if any.
    pub preset: Option<ExpressionPreset>,
    /// Morph targets moved by this expression.
    pub binds: Vec<MorphBind>,
    /// Binary expressions snap to fully on or off.
    pub is_binary: bool,
}

/// The expression vocabulary of one avatar.
#[derive(Debug, Clone, Default)]
pub struct ExpressionTable {
    expressions: Vec<Expression>,
    by_name: HashMap<String, usize>,
}

impl ExpressionTable {
    /// Builds a table. Later duplicates of a name are ignored.
    pub fn new(expressions: Vec<Expression>) -> Self {
        let mut table = Self::default();
        for expression in expressions {
            if table.by_name.contains_key(&expression.name) {
                log::warn!("Duplicate expression '{}' ignored", expression.name);
                continue;
            }
            table
                .by_name
                .insert(expression.name.clone(), table.expressions.len());
            table.expressions.push(expression);
        }
        table
    }

    /// Returns the expression with the given name.
    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.by_name.get(name).map(|&i| &self.expressions[i])
    }

    /// Returns `true` if the table defines `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterates expressions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Expression> {
        self.expressions.iter()
    }

    /// Returns the expression names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.expressions.iter().map(|e| e.name.as_str()).collect()
    }

    /// Returns the number of expressions.
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Resolves expression weights into per-mesh morph target weights.
    ///
    /// `morphs[mesh][index]` is overwritten. Contributions add up and are clamped
    /// to `[0, 1]`; binds pointing outside `morphs` are skipped.
    pub fn resolve_morph_weights(&self, weights: &ExpressionWeights, morphs: &mut [Vec<f32>]) {
        for mesh in morphs.iter_mut() {
            mesh.iter_mut().for_each(|w| *w = 0.0);
        }
        for expression in &self.expressions {
            let mut weight = weights.get(&expression.name);
            if expression.is_binary {
                weight = if weight > 0.5 { 1.0 } else { 0.0 };
            }
            if weight <= 0.0 {
                continue;
            }
            for bind in &expression.binds {
                if let Some(slot) = morphs
                    .get_mut(bind.mesh)
                    .and_then(|m| m.get_mut(bind.morph_index))
                {
                    *slot = (*slot + weight * bind.weight).clamp(0.0, 1.0);
                }
            }
        }
    }
}

/// Current weight of each expression, in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionWeights {
    weights: HashMap<String, f32>,
}

impl ExpressionWeights {
    /// Creates an empty weight set (every expression at 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a weight, clamped to `[0, 1]`. Non-finite values become 0.
    pub fn set(&mut self, name: &str, weight: f32) {
        let weight = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match self.weights.get_mut(name) {
            Some(slot) => *slot = weight,
            None => {
                self.weights.insert(name.to_owned(), weight);
            }
        }
    }

    /// Returns the weight of `name`, or 0 if never set.
    pub fn get(&self, name: &str) -> f32 {
        self.weights.get(name).copied().unwrap_or(0.0)
    }

    /// Resets every weight to 0.
    pub fn clear(&mut self) {
        self.weights.clear();
    }

    /// Iterates the explicitly set weights.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.weights.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ExpressionTable {
        ExpressionTable::new(vec![
            Expression {
                name: "aa".into(),
                preset: Some(ExpressionPreset::Aa),
                binds: vec![MorphBind { mesh: 0, morph_index: 1, weight: 0.8 }],
                is_binary: false,
            },
            Expression {
                name: "happy".into(),
                preset: Some(ExpressionPreset::Happy),
                binds: vec![
                    MorphBind { mesh: 0, morph_index: 1, weight: 0.5 },
                    MorphBind { mesh: 5, morph_index: 0, weight: 1.0 },
                ],
                is_binary: true,
            },
        ])
    }

    #[test]
    fn test_weights_are_clamped_and_nan_safe() {
        let mut weights = ExpressionWeights::new();
        weights.set("aa", 3.0);
        weights.set("oh", f32::NAN);
        assert_eq!(weights.get("aa"), 1.0);
        assert_eq!(weights.get("oh"), 0.0);
        assert_eq!(weights.get("missing"), 0.0);
    }

    #[test]
    fn test_resolve_accumulates_and_clamps() {
        let table = table();
        let mut weights = ExpressionWeights::new();
        weights.set("aa", 1.0);
        weights.set("happy", 0.7);
        let mut morphs = vec![vec![0.3, 0.3]];
        table.resolve_morph_weights(&weights, &mut morphs);
        assert_eq!(morphs[0][0], 0.0);
        assert_eq!(morphs[0][1], 1.0);
    }

    #[test]
    fn test_binary_expression_snaps_off() {
        let table = table();
        let mut weights = ExpressionWeights::new();
        weights.set("happy", 0.4);
        let mut morphs = vec![vec![0.0, 0.0]];
        table.resolve_morph_weights(&weights, &mut morphs);
        assert_eq!(morphs[0][1], 0.0);
    }

    #[test]
    fn test_vrm0_presets_map_to_vrm1_names() {
        assert_eq!(ExpressionPreset::from_vrm0("A"), Some(ExpressionPreset::Aa));
        assert_eq!(ExpressionPreset::from_vrm0("Joy"), Some(ExpressionPreset::Happy));
        assert_eq!(ExpressionPreset::from_vrm0("unknown"), None);
        assert_eq!(ExpressionPreset::from_vrm1("blinkLeft"), Some(ExpressionPreset::BlinkLeft));
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let table = ExpressionTable::new(vec![
            Expression { name: "x".into(), preset: None, binds: vec![], is_binary: false },
            Expression { name: "x".into(), preset: None, binds: vec![], is_binary: true },
        ]);
        assert_eq!(table.len(), 1);
        assert!(!table.get("x").unwrap().is_binary);
    }
}
