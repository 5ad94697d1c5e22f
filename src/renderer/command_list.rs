//! Command-list recording guard.
//!
//! The backend allows exactly one command list to record at a time. The
//! [`CommandListRecorder`] owns that invariant for one rendering context: opening a
//! second list while one is recording is a [`ShaderError::NestedRecording`] instead
//! of silently corrupting the outer list. Callers compile every child object first and
//! only then open their own list.

use crate::errors::{Result, ShaderError};
use crate::renderer::backend::{CommandListId, RenderBackend};

#[derive(Debug, Default)]
pub struct CommandListRecorder {
    recording: Option<CommandListId>,
}

impl CommandListRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// The list currently being recorded, if any.
    #[must_use]
    pub fn current(&self) -> Option<CommandListId> {
        self.recording
    }

    pub fn begin(&mut self, backend: &mut dyn RenderBackend, list: CommandListId) -> Result<()> {
        if let Some(open) = self.recording {
            log::error!("Command list {list:?} opened while {open:?} is still recording");
            return Err(ShaderError::NestedRecording);
        }
        backend.begin_command_list(list);
        self.recording = Some(list);
        Ok(())
    }

    pub fn end(&mut self, backend: &mut dyn RenderBackend) -> Result<CommandListId> {
        let list = self.recording.take().ok_or(ShaderError::NotRecording)?;
        backend.end_command_list();
        Ok(list)
    }

    /// Records `body` into `list`.
    ///
    /// The list is always closed again, even when `body` fails.
    pub fn record<F>(&mut self, backend: &mut dyn RenderBackend, list: CommandListId, body: F) -> Result<()>
    where
        F: FnOnce(&mut dyn RenderBackend) -> Result<()>,
    {
        self.begin(backend, list)?;
        let result = body(backend);
        self.end(backend)?;
        result
    }
}
