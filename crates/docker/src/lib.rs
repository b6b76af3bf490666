//! Container runtime boundary.
//!
//! Defines the [`ContainerRuntime`](runtime::ContainerRuntime) trait and two
//! implementations: [`DockerCli`](cli::DockerCli), which drives the `docker`
//! binary as a subprocess, and [`InMemoryRuntime`](memory::InMemoryRuntime),
//! an in-process stand-in with fault injection. On top of the trait sit the
//! [`ImageBuilder`](builder::ImageBuilder) and the
//! [`ContainerController`](controller::ContainerController).

pub mod builder;
pub mod cli;
pub mod controller;
pub mod error;
pub mod memory;
pub mod names;
pub mod runtime;
pub mod subprocess;
