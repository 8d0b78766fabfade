pub mod chat;
pub mod registration;
pub mod session;

pub use chat::{ChatSubscription, ChatSync};
pub use registration::{
    RegistrationDetails, RegistrationForm, RegistrationOutcome, register_user,
};
pub use session::{BootstrapError, Session, SessionBootstrapper};
