pub mod constants;
pub mod constraints;
pub mod fit_particle;
pub mod four_momentum;
pub mod hypotheses;
pub mod kin_fitter;
pub mod kinfit_errors;
mod linalg;
pub mod ranking;
