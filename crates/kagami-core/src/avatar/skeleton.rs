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

//! Joint hierarchy with rest pose, animated local pose, and cached world transforms.

use super::HumanoidBone;
use crate::math::{Quaternion, Transform, Vec3};
use std::collections::HashMap;
use thiserror::Error;

/// An error raised when a joint list does not form a valid hierarchy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SkeletonError {
    /// A joint referenced a parent that does not come before it in the list.
    #[error("joint {joint} references parent {parent} which is not ordered before it")]
    ParentOrder {
        /// Index of the offending joint.
        joint: usize,
        /// The parent index it referenced.
        parent: usize,
    },
    /// A humanoid bone was mapped to a joint index outside the list.
    #[error("humanoid bone '{bone}' maps to missing joint {joint}")]
    UnknownJoint {
        /// The humanoid bone.
        bone: HumanoidBone,
        /// The out-of-range joint index.
        joint: usize,
    },
}

/// A single node of the skeleton.
#[derive(Debug, Clone)]
pub struct Joint {
    /// The node name from the source file.
    pub name: String,
    /// Index of the parent joint, always smaller than this joint's own index.
    pub parent: Option<usize>,
    /// Bind (rest) pose, relative to the parent.
    pub rest: Transform,
    /// Current pose, relative to the parent.
    pub local: Transform,
}

impl Joint {
    /// Creates a joint whose current pose equals its rest pose.
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            rest,
            local: rest,
        }
    }
}

/// The skeleton of one avatar.
///
/// Joints are stored parents-first so world transforms resolve in one forward pass.
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<Joint>,
    world: Vec<Transform>,
    humanoid: HashMap<HumanoidBone, usize>,
    root: Transform,
}

impl Skeleton {
    /// Builds a skeleton and computes its rest-pose world transforms.
    pub fn new(
        joints: Vec<Joint>,
        humanoid: HashMap<HumanoidBone, usize>,
    ) -> Result<Self, SkeletonError> {
        for (index, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                if parent >= index {
                    return Err(SkeletonError::ParentOrder {
                        joint: index,
                        parent,
                    });
                }
            }
        }
        if let Some((&bone, &joint)) = humanoid.iter().find(|(_, joint)| **joint >= joints.len()) {
            return Err(SkeletonError::UnknownJoint { bone, joint });
        }

        let mut skeleton = Self {
            world: vec![Transform::IDENTITY; joints.len()],
            joints,
            humanoid,
            root: Transform::IDENTITY,
        };
        skeleton.update_world_transforms();
        Ok(skeleton)
    }

    /// Sets the transform applied above every root joint and refreshes world transforms.
    pub fn set_root_transform(&mut self, root: Transform) {
        self.root = root;
        self.update_world_transforms();
    }

    /// Returns the number of joints.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Returns `true` if the skeleton has no joints.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Returns all joints in hierarchy order.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Returns the joint index mapped to a humanoid bone.
    pub fn bone_index(&self, bone: HumanoidBone) -> Option<usize> {
        self.humanoid.get(&bone).copied()
    }

    /// Returns `true` if the humanoid bone is mapped.
    pub fn has_bone(&self, bone: HumanoidBone) -> bool {
        self.humanoid.contains_key(&bone)
    }

    /// Returns the cached world transform of a joint.
    pub fn world_transform(&self, joint: usize) -> Option<&Transform> {
        self.world.get(joint)
    }

    /// Returns the cached world-space position of a humanoid bone.
    pub fn bone_world_position(&self, bone: HumanoidBone) -> Option<Vec3> {
        self.bone_index(bone)
            .and_then(|index| self.world.get(index))
            .map(|t| t.translation)
    }

    /// Sets a joint's local rotation as an offset from its rest rotation.
    pub fn set_pose_rotation(&mut self, joint: usize, rotation: Quaternion) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.local.rotation = (j.rest.rotation * rotation).normalize();
        }
    }

    /// Sets a joint's local translation as an offset from its rest translation.
    pub fn set_pose_translation(&mut self, joint: usize, offset: Vec3) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.local.translation = j.rest.translation + offset;
        }
    }

    /// Returns every joint to its rest pose.
    pub fn reset_pose(&mut self) {
        for joint in &mut self.joints {
            joint.local = joint.rest;
        }
        self.update_world_transforms();
    }

    /// Recomputes every world transform from the current local poses.
    pub fn update_world_transforms(&mut self) {
        for index in 0..self.joints.len() {
            let joint = &self.joints[index];
            let parent_world = match joint.parent {
                Some(parent) => self.world[parent],
                None => self.root,
            };
            self.world[index] = parent_world.mul_transform(&joint.local);
        }
    }
}
