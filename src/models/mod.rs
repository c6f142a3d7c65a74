pub mod profile;
pub mod session;
pub mod stop;
pub mod template;
pub mod trip;
pub mod user;
