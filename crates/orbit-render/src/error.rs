// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

use thiserror::Error;

use crate::ImageIndex;

/// Step of the frame lifecycle an error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStage {
    Setup,
    Wait,
    Acquire,
    Reset,
    Update,
    Record,
    Submit,
    Present,
    Recreate,
    Idle,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameStage::Setup => "setup",
            FrameStage::Wait => "fence wait",
            FrameStage::Acquire => "acquire",
            FrameStage::Reset => "fence reset",
            FrameStage::Update => "uniform update",
            FrameStage::Record => "command recording",
            FrameStage::Submit => "submit",
            FrameStage::Present => "present",
            FrameStage::Recreate => "surface recreation",
            FrameStage::Idle => "device idle-wait",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{stage} failed")]
    Device {
        stage: FrameStage,
        #[source]
        source: anyhow::Error,
    },
    #[error("presentation engine returned {image} but only {count} images exist")]
    UnknownImage { image: ImageIndex, count: usize },
}

impl FrameError {
    pub(crate) fn at(stage: FrameStage) -> impl FnOnce(anyhow::Error) -> FrameError {
        move |source| FrameError::Device { stage, source }
    }

    pub fn stage(&self) -> Option<FrameStage> {
        match self {
            FrameError::Device { stage, .. } => Some(*stage),
            FrameError::UnknownImage { .. } => None,
        }
    }
}
