//! The genotyping pipeline.
//!
//! For each assembly the [`worker`] aligns it to the reference
//! ([`Aligner`](crate::external::Aligner)), reads the pileup at every typing
//! site ([`extract`]), and classifies each observed base ([`classify`]). The
//! [`dispatch`] module runs workers over the whole assembly list on a bounded
//! pool and returns rows in input order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use assembly_snptyper::external::{CancelToken, Toolchain};
//! use assembly_snptyper::parsing::{assembly_list, vcf};
//! use assembly_snptyper::typing::{dispatch, AssemblyWorker};
//! use std::path::Path;
//!
//! let targets = vcf::load(Path::new("scheme.vcf")).unwrap();
//! let records = assembly_list::parse_assembly_list(Path::new("assemblies.txt")).unwrap();
//!
//! let toolchain = Toolchain::default();
//! let aligner = toolchain.aligner();
//! let pileup = toolchain.pileup_reader();
//! let worker = AssemblyWorker::new(Path::new("reference.fa"), &targets, &aligner, &pileup);
//!
//! let results = dispatch::run(&records, 4, &worker, &CancelToken::new()).unwrap();
//! ```

pub mod classify;
pub mod dispatch;
pub mod extract;
pub mod worker;

pub use classify::classify;
pub use extract::CallPolicy;
pub use worker::{AssemblyWorker, ProcessAssembly};
