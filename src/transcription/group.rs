// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Groups of adjacent trajectories.
//!
//! A group does not own its trajectories. It records their unique ids and
//! positions, and the owning phrase resolves them back to live trajectories.

use serde::{Deserialize, Serialize};

use super::trajectory::{new_unique_id, Trajectory};
use crate::error::{ModelError, Result};

/// Reference to a grouped trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub unique_id: String,
    /// Position in the phrase when the group was stored
    #[serde(default)]
    pub num: Option<usize>,
}

/// A structural bundle of consecutive trajectories in one phrase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    id: String,
    #[serde(rename = "trajectories")]
    members: Vec<MemberRef>,
}

impl Group {
    /// Group trajectories that sit next to each other in a single phrase
    pub fn new(trajectories: &[&Trajectory]) -> Result<Self> {
        if trajectories.len() < 2 {
            return Err(ModelError::GroupNotContiguous);
        }
        let phrase_idx = trajectories[0].phrase_idx;
        if trajectories.iter().any(|t| t.phrase_idx != phrase_idx) {
            return Err(ModelError::GroupNotContiguous);
        }
        let mut nums = trajectories
            .iter()
            .map(|t| t.num.ok_or(ModelError::TrajNumUndefined))
            .collect::<Result<Vec<usize>>>()?;
        nums.sort_unstable();
        if nums.windows(2).any(|w| w[1] != w[0] + 1) {
            return Err(ModelError::GroupNotContiguous);
        }

        let mut members: Vec<MemberRef> = trajectories
            .iter()
            .map(|t| MemberRef {
                unique_id: t.unique_id.clone(),
                num: t.num,
            })
            .collect();
        members.sort_by_key(|m| m.num);
        Ok(Self {
            id: new_unique_id(),
            members,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn members(&self) -> &[MemberRef] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, traj_uid: &str) -> bool {
        self.members.iter().any(|m| m.unique_id == traj_uid)
    }

    /// Resolve members against a trajectory row: by unique id first, then
    /// by stored position. Rewrites each member to the resolved trajectory.
    pub fn relink(&mut self, row: &[Trajectory]) -> Result<()> {
        let mut resolved = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let found = row
                .iter()
                .find(|t| t.unique_id == member.unique_id)
                .or_else(|| member.num.and_then(|n| row.iter().find(|t| t.num == Some(n))));
            match found {
                Some(t) => resolved.push(MemberRef {
                    unique_id: t.unique_id.clone(),
                    num: t.num,
                }),
                None => return Err(ModelError::GroupMemberMissing(member.unique_id.clone())),
            }
        }
        self.members = resolved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Pitch;

    fn traj(num: usize) -> Trajectory {
        let mut t = Trajectory::fixed(Pitch::default(), 1.0);
        t.num = Some(num);
        t.phrase_idx = Some(0);
        t
    }

    #[test]
    fn test_group_contiguous() {
        let (a, b, c) = (traj(0), traj(1), traj(2));
        let g = Group::new(&[&b, &a, &c]).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(g.members()[0].unique_id, a.unique_id);
        assert!(g.contains(&c.unique_id));
    }

    #[test]
    fn test_group_rejects_gaps_and_mixed_phrases() {
        let (a, c) = (traj(0), traj(2));
        assert!(matches!(Group::new(&[&a, &c]), Err(ModelError::GroupNotContiguous)));

        let mut other = traj(1);
        other.phrase_idx = Some(1);
        assert!(Group::new(&[&a, &other]).is_err());
        assert!(Group::new(&[&a]).is_err());
    }

    #[test]
    fn test_relink_falls_back_to_position() {
        let (a, b) = (traj(0), traj(1));
        let mut g = Group::new(&[&a, &b]).unwrap();
        let fresh = vec![traj(0), traj(1)];
        g.relink(&fresh).unwrap();
        assert_eq!(g.members()[0].unique_id, fresh[0].unique_id);
        assert_eq!(g.members()[1].unique_id, fresh[1].unique_id);

        let mut missing = Group::new(&[&fresh[0], &fresh[1]]).unwrap();
        assert!(matches!(missing.relink(&[traj(5)]), Err(ModelError::GroupMemberMissing(_))));
    }

    #[test]
    fn test_wire_form() {
        let (a, b) = (traj(0), traj(1));
        let g = Group::new(&[&a, &b]).unwrap();
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["trajectories"][1]["num"], 1);
        assert_eq!(json["trajectories"][0]["uniqueId"], a.unique_id.as_str());
        let back: Group = serde_json::from_value(json).unwrap();
        assert_eq!(back, g);
    }
}
