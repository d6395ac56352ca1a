pub mod acceptance;
pub mod audit_log;
pub mod enrollment;
pub mod exam;
pub mod exam_result;
pub mod notification;
pub mod question;
pub mod session;
pub mod student_answer;
pub mod user;
pub mod violation;
