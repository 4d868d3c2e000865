pub mod domain;
pub mod gate;
pub mod ports;

pub use domain::{
    AuthSession, ChangeKind, HumanizeParams, NewProject, Plan, PlanAllowances, Profile, Project,
    RowChange, Table, User, UserCredentials,
};
pub use gate::{evaluate, GateDecision, InputLimits, InputRejection};
pub use ports::{
    ChangeCallback, ChangeFeed, ChangeFilter, DatabaseService, HumanizerService, PortError,
    PortResult, Subscription,
};
