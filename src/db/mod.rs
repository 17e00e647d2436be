pub mod academic_sessions;
pub mod attendance;
pub mod certificates;
pub mod classes;
pub mod dashboard;
pub mod feedback;
pub mod fees;
pub mod permissions;
pub mod promotions;
pub mod result_deadlines;
pub mod schema;
pub mod sessions;
pub mod students;
pub mod teacher_assignments;
pub mod users;

pub use academic_sessions::*;
pub use attendance::*;
pub use certificates::*;
pub use classes::*;
pub use dashboard::*;
pub use feedback::*;
pub use fees::*;
pub use permissions::*;
pub use promotions::*;
pub use result_deadlines::*;
pub use schema::*;
pub use sessions::*;
pub use students::*;
pub use teacher_assignments::*;
pub use users::*;
