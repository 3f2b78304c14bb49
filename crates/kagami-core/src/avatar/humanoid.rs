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

//! The humanoid bone vocabulary shared by avatars and animation clips.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named humanoid joint, using the VRM 1.0 bone names.
///
/// Finger bones are not listed: neither camera framing nor the idle motions
/// drive them, so the loader leaves them as plain skeleton joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum HumanoidBone {
    Hips,
    Spine,
    Chest,
    UpperChest,
    Neck,
    Head,
    Jaw,
    LeftEye,
    RightEye,
    LeftShoulder,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,
    RightShoulder,
    RightUpperArm,
    RightLowerArm,
    RightHand,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    LeftToes,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    RightToes,
}

impl HumanoidBone {
    /// Every supported bone, parents listed before children.
    pub const ALL: [HumanoidBone; 25] = [
        HumanoidBone::Hips,
        HumanoidBone::Spine,
        HumanoidBone::Chest,
        HumanoidBone::UpperChest,
        HumanoidBone::Neck,
        HumanoidBone::Head,
        HumanoidBone::Jaw,
        HumanoidBone::LeftEye,
        HumanoidBone::RightEye,
        HumanoidBone::LeftShoulder,
        HumanoidBone::LeftUpperArm,
        HumanoidBone::LeftLowerArm,
        HumanoidBone::LeftHand,
        HumanoidBone::RightShoulder,
        HumanoidBone::RightUpperArm,
        HumanoidBone::RightLowerArm,
        HumanoidBone::RightHand,
        HumanoidBone::LeftUpperLeg,
        HumanoidBone::LeftLowerLeg,
        HumanoidBone::LeftFoot,
        HumanoidBone::LeftToes,
        HumanoidBone::RightUpperLeg,
        HumanoidBone::RightLowerLeg,
        HumanoidBone::RightFoot,
        HumanoidBone::RightToes,
    ];

    /// The VRM name of the bone (`"upperChest"`, `"leftHand"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            HumanoidBone::Hips => "hips",
            HumanoidBone::Spine => "spine",
            HumanoidBone::Chest => "chest",
            HumanoidBone::UpperChest => "upperChest",
            HumanoidBone::Neck => "neck",
            HumanoidBone::Head => "head",
            HumanoidBone::Jaw => "jaw",
            HumanoidBone::LeftEye => "leftEye",
            HumanoidBone::RightEye => "rightEye",
            HumanoidBone::LeftShoulder => "leftShoulder",
            HumanoidBone::LeftUpperArm => "leftUpperArm",
            HumanoidBone::LeftLowerArm => "leftLowerArm",
            HumanoidBone::LeftHand => "leftHand",
            HumanoidBone::RightShoulder => "rightShoulder",
            HumanoidBone::RightUpperArm => "rightUpperArm",
            HumanoidBone::RightLowerArm => "rightLowerArm",
            HumanoidBone::RightHand => "rightHand",
            HumanoidBone::LeftUpperLeg => "leftUpperLeg",
            HumanoidBone::LeftLowerLeg => "leftLowerLeg",
            HumanoidBone::LeftFoot => "leftFoot",
            HumanoidBone::LeftToes => "leftToes",
            HumanoidBone::RightUpperLeg => "rightUpperLeg",
            HumanoidBone::RightLowerLeg => "rightLowerLeg",
            HumanoidBone::RightFoot => "rightFoot",
            HumanoidBone::RightToes => "rightToes",
        }
    }

    /// Looks a bone up by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|bone| bone.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for HumanoidBone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trips_every_bone() {
        for bone in HumanoidBone::ALL {
            assert_eq!(HumanoidBone::from_name(bone.name()), Some(bone));
        }
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(HumanoidBone::from_name("HEAD"), Some(HumanoidBone::Head));
        assert_eq!(HumanoidBone::from_name("upperchest"), Some(HumanoidBone::UpperChest));
        assert_eq!(HumanoidBone::from_name("leftThumbProximal"), None);
    }
}
