pub mod corpus;
pub mod error;
pub mod model;
pub mod routines {
    pub mod logger;
    pub mod settings;
    pub mod solver;
    pub mod update;
}
pub mod structs {
    pub mod batch;
    pub mod dictionary;
    pub mod suffstats;
}

pub mod prelude {
    pub use crate::corpus::{Corpus, Document};
    pub use crate::error::NmfError;
    pub use crate::model::{Nmf, Status};
    pub use crate::routines::logger::setup_log;
    pub use crate::routines::settings::{self, Settings};
    pub use crate::routines::solver::{solve_h, solve_r, Solver, SolverOutput};
    pub use crate::routines::update::solve_w;
    pub use crate::structs::batch::Batch;
    pub use crate::structs::dictionary::Dictionary;
    pub use crate::structs::suffstats::SuffStats;
}
