//! Database models split into domain-specific modules.

pub mod attendance;
pub mod bill;
pub mod complaint;
pub mod guard;
pub mod night_round;
pub mod payroll;
pub mod rating;
pub mod shift;
pub mod site;
pub mod spend;
pub mod training;
pub mod user;

pub use attendance::*;
pub use bill::*;
pub use complaint::*;
pub use guard::*;
pub use night_round::*;
pub use payroll::*;
pub use rating::*;
pub use shift::*;
pub use site::*;
pub use spend::*;
pub use training::*;
pub use user::*;
