//! Shared helpers for integration tests.
//!
//! [`FakeRunner`] stands in for `ffmpeg`/`ffprobe`: it records every
//! invocation, resolves the bytes the decoder would have read (the `-i` file
//! or piped standard input), and answers through a test-supplied handler.

#![allow(dead_code)]

use std::sync::Mutex;

use framegrab::{
    CancellationToken, CommandOutput, CommandRunner, ExitInfo, FrameGrabError, Invocation,
};

type Handler = dyn Fn(&Invocation, &[u8]) -> CommandOutput + Send + Sync;

pub struct FakeRunner {
    handler: Box<Handler>,
    invocations: Mutex<Vec<Invocation>>,
    missing_programs: Vec<String>,
}

impl FakeRunner {
    pub fn new(
        handler: impl Fn(&Invocation, &[u8]) -> CommandOutput + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            invocations: Mutex::new(Vec::new()),
            missing_programs: Vec::new(),
        }
    }

    /// A decoder that always emits `frames` back to back.
    pub fn emitting(frames: Vec<Vec<u8>>) -> Self {
        Self::new(move |_, _| success(frames.concat()))
    }

    /// A decoder that always fails with `stderr`.
    pub fn failing(code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        Self::new(move |_, _| failure(code, &stderr))
    }

    pub fn with_missing_program(mut self, program: &str) -> Self {
        self.missing_programs.push(program.to_string());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|invocation| invocation.program == program)
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        invocation: &Invocation,
        cancellation: &CancellationToken,
    ) -> Result<CommandOutput, FrameGrabError> {
        if cancellation.is_cancelled() {
            return Err(FrameGrabError::Cancelled);
        }

        self.invocations.lock().unwrap().push(invocation.clone());
        let input = decoder_input(invocation);
        Ok((self.handler)(invocation, &input))
    }

    fn check_available(&self, program: &str) -> Result<(), FrameGrabError> {
        if self.missing_programs.iter().any(|missing| missing == program) {
            return Err(FrameGrabError::ToolUnavailable {
                program: program.to_string(),
                reason: "not found".to_string(),
            });
        }
        Ok(())
    }
}

/// The bytes the decoder would read: the `-i` file, or standard input for
/// `pipe:0`. Empty for invocations without `-i`.
pub fn decoder_input(invocation: &Invocation) -> Vec<u8> {
    let Some(position) = invocation.args.iter().position(|arg| arg == "-i") else {
        return Vec::new();
    };
    match invocation.args.get(position + 1).map(String::as_str) {
        Some("pipe:0") => invocation.stdin.clone().unwrap_or_default(),
        Some(path) => std::fs::read(path).unwrap_or_default(),
        None => Vec::new(),
    }
}

/// The value following `flag` in the invocation's arguments.
pub fn argument_after<'a>(invocation: &'a Invocation, flag: &str) -> Option<&'a str> {
    let position = invocation.args.iter().position(|arg| arg == flag)?;
    invocation.args.get(position + 1).map(String::as_str)
}

pub fn success(stdout: Vec<u8>) -> CommandOutput {
    CommandOutput {
        status: ExitInfo::SUCCESS,
        stdout,
        stderr: Vec::new(),
    }
}

pub fn failure(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        status: ExitInfo::failure(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// A minimal SOI..EOI byte sequence tagged with `tag`.
pub fn jpeg_like(tag: u8) -> Vec<u8> {
    vec![0xFF, 0xD8, tag, tag, 0xFF, 0xD9]
}
