//! # mtbdd-rs: string-valued decision diagrams in Rust
//!
//! **`mtbdd-rs`** compiles a Boolean truth table over N variables into a
//! reduced, ordered decision diagram whose leaves carry arbitrary
//! string-valued outputs, minimizes the diagram via the classical reduction
//! and elimination rules, prunes "don't care" outputs, and evaluates the
//! diagram against external resolver functions.
//!
//! ## What is the diagram?
//!
//! A rooted DAG: the root and the internal nodes each test one variable and
//! branch on `0`/`1`; the leaves carry the output values. Unlike a plain
//! BDD the codomain is not `{0, 1}` but any set of strings, so equal
//! subfunctions with different output values stay distinct while everything
//! else shares structure.
//!
//! ## Key properties
//!
//! - **Manager-centric**: all structural edits go through the
//!   [`Diagram`][diagram::Diagram], which keeps its node registry, level
//!   index, and the per-node parent multisets exact in the same step as
//!   every edit.
//! - **Up-references**: each non-root node records every `(parent, label)`
//!   edge pointing at it, so rewiring and deletion are local index updates
//!   on a shared DAG without ownership cycles.
//! - **Audited**: [`ensure_correct_bdd`][validate::ensure_correct_bdd]
//!   checks the whole invariant set; debug builds re-run it after every
//!   mutating operation.
//!
//! ## Basic usage
//!
//! ```rust
//! use mtbdd_rs::{bit_resolvers, create_bdd_from_truth_table, TruthTable};
//!
//! let table = TruthTable::from_entries([
//!     ("00".to_string(), "skip".to_string()),
//!     ("01".to_string(), "skip".to_string()),
//!     ("10".to_string(), "fetch".to_string()),
//!     ("11".to_string(), "skip".to_string()),
//! ])
//! .unwrap();
//!
//! let mut bdd = create_bdd_from_truth_table(&table).unwrap();
//! assert_eq!(bdd.count_nodes(), 7);
//!
//! bdd.minimize();
//! assert!(bdd.count_nodes() < 7);
//!
//! // Bind variable i to bit i of the key: resolution returns the table.
//! let resolvers = bit_resolvers(2);
//! assert_eq!(bdd.resolve(&resolvers, "10").unwrap(), "fetch");
//! assert_eq!(bdd.resolve(&resolvers, "11").unwrap(), "skip");
//! ```
//!
//! ## Core components
//!
//! - **[`builder`]**: truth-table validation and the canonical, non-reduced
//!   build.
//! - **[`diagram`]**: the manager; navigation, resolution, and the plain
//!   serialized form.
//! - **[`validate`]**: the full-graph structural audit.
//! - **[`classify`]**: the change-event state classifier producing the
//!   bit vector that diagrams over query states bind to.
//!
//! Minimization ([`Diagram::minimize`][diagram::Diagram::minimize]) and
//! don't-care pruning
//! ([`Diagram::remove_irrelevant_leaf_nodes`][diagram::Diagram::remove_irrelevant_leaf_nodes])
//! are methods on the manager.

pub mod builder;
pub mod classify;
pub mod diagram;
pub mod error;
pub mod node;
pub mod parents;
pub mod types;
pub mod validate;

mod prune;
mod reduce;

pub use builder::{create_bdd_from_truth_table, TruthTable};
pub use diagram::{bit_resolvers, Diagram, ResolverFn};
pub use error::BddError;
pub use validate::ensure_correct_bdd;
