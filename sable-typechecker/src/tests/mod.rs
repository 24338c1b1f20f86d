//! Scenario tests for the Sable typechecker
//!
//! Unit tests live beside each module; these exercise the table the way
//! the analyzer driver does, across several modules at once.



// Registration, matching and evidence
mod test_trait_resolution;
