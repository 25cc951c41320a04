pub(crate) use build::Build;
pub(crate) use check::Check;
pub(crate) use completions::Completions;
pub(crate) use config::Config;
pub(crate) use entities::Entities;
pub(crate) use init::Init;
pub(crate) use sources::Sources;
pub(crate) use version::Version;

mod build;
mod check;
mod completions;
mod config;
mod entities;
mod init;
mod sources;
mod version;
