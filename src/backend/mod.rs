//! Display management backends
//!
//! A backend knows how to discover the connected outputs and how to switch
//! them. Today there is one: [`xrandr::XrandrBackend`].

use crate::error::Result;
use crate::layout::CommandInvocation;
use crate::request::ValidatedRequest;
use crate::topology::Topology;

pub mod xrandr;

pub use xrandr::XrandrBackend;

pub trait DisplayBackend {
    /// Queries the connected outputs and their modes.
    fn read(&self) -> Result<Topology>;

    /// Builds the command that realizes `request`, without running it.
    fn compose(&self, topology: &Topology, request: &ValidatedRequest) -> Result<CommandInvocation>;

    /// Runs a composed command and returns the tool's raw output.
    fn execute(&self, invocation: &CommandInvocation) -> Result<String>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
