//! Animation lookup tables: which clips each state may play
//!
//! A state lists keywords; a clip is a candidate for the state when its
//! name contains a keyword that is not immediately followed by `_`. That
//! lets `idle1` and `idle2` match `idle` while `idle_air` does not.

use crate::state::AnimatorState;
use flint_core::NameHash;
use serde::{Deserialize, Serialize};

/// One candidate clip for a state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimInfo {
    pub clip_index: usize,
    pub clip_name: String,
    pub clip_length: f32,
}

impl AnimInfo {
    /// Placeholder stored when no clip matched, so index 0 is always valid
    pub fn sentinel() -> Self {
        Self::default()
    }

    pub fn is_sentinel(&self) -> bool {
        self.clip_name.is_empty()
    }
}

/// A clip as exposed by the playback surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipDesc {
    pub name: String,
    pub length: f32,
}

impl ClipDesc {
    pub fn new(name: &str, length: f32) -> Self {
        Self {
            name: name.to_string(),
            length,
        }
    }
}

/// The clips of an animation set, per entity variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSetDesc {
    pub name: String,
    pub variants: Vec<Vec<ClipDesc>>,
}

impl AnimationSetDesc {
    pub fn new(name: &str, variants: Vec<Vec<ClipDesc>>) -> Self {
        Self {
            name: name.to_string(),
            variants,
        }
    }

    pub fn hash(&self) -> NameHash {
        NameHash::new(&self.name)
    }
}

/// True if `clip` contains `keyword` (case-insensitive) at its first
/// occurrence and that occurrence ends the name or is not followed by `_`.
pub fn matches_keyword(clip: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    let clip = clip.to_ascii_lowercase();
    let keyword = keyword.to_ascii_lowercase();
    let Some(start) = clip.find(&keyword) else {
        return false;
    };
    let end = start + keyword.len();
    end >= clip.len() || clip.as_bytes()[end] != b'_'
}

/// Candidate clips for every (entity variant, state) pair of one animation set
#[derive(Debug, Clone, Default)]
pub struct AnimSetTable {
    variants: Vec<Vec<Vec<AnimInfo>>>,
}

impl AnimSetTable {
    /// Match every state's keywords against every variant's clips, keyword order first
    pub fn build(set: &AnimationSetDesc, states: &[AnimatorState]) -> Self {
        let variants = set
            .variants
            .iter()
            .map(|clips| states.iter().map(|state| state_clips(state, clips)).collect())
            .collect();
        Self { variants }
    }

    /// Candidates for a state; empty if the variant or state is out of range
    pub fn clips(&self, variant: usize, state: usize) -> &[AnimInfo] {
        self.variants
            .get(variant)
            .and_then(|states| states.get(state))
            .map(|clips| clips.as_slice())
            .unwrap_or(&[])
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

fn state_clips(state: &AnimatorState, clips: &[ClipDesc]) -> Vec<AnimInfo> {
    let mut infos = Vec::new();
    for keyword in state.keyword_list() {
        for (index, clip) in clips.iter().enumerate() {
            if matches_keyword(&clip.name, keyword) {
                infos.push(AnimInfo {
                    clip_index: index,
                    clip_name: clip.name.clone(),
                    clip_length: clip.length,
                });
            }
        }
    }
    if infos.is_empty() {
        infos.push(AnimInfo::sentinel());
    }
    infos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_boundary() {
        assert!(matches_keyword("idle1", "idle"));
        assert!(!matches_keyword("idle_air", "idle"));
        assert!(matches_keyword("idle", "idle"));
        assert!(matches_keyword("IDLE2", "idle"));
        assert!(matches_keyword("running", "run"));
        assert!(!matches_keyword("walk", "idle"));
        assert!(!matches_keyword("walk", ""));
    }

    #[test]
    fn only_first_occurrence_counts() {
        // first "idle" is followed by '_', so the later one is never considered
        assert!(!matches_keyword("idle_idle", "idle"));
    }

    #[test]
    fn build_orders_by_keyword_then_clip() {
        let set = AnimationSetDesc::new(
            "hero",
            vec![vec![
                ClipDesc::new("run", 0.8),
                ClipDesc::new("walk1", 1.0),
                ClipDesc::new("walk2", 1.2),
                ClipDesc::new("walk_air", 1.0),
            ]],
        );
        let states = vec![
            AnimatorState::new("State_Walk", "walk;run", false, 0.0, Vec::new()),
            AnimatorState::new("State_Swim", "swim", false, 0.0, Vec::new()),
        ];
        let table = AnimSetTable::build(&set, &states);

        let walk: Vec<_> = table.clips(0, 0).iter().map(|a| a.clip_index).collect();
        assert_eq!(walk, vec![1, 2, 0]);
        assert!((table.clips(0, 0)[1].clip_length - 1.2).abs() < 1e-5);

        let swim = table.clips(0, 1);
        assert_eq!(swim.len(), 1);
        assert!(swim[0].is_sentinel());

        assert!(table.clips(1, 0).is_empty());
        assert!(table.clips(0, 5).is_empty());
    }
}
