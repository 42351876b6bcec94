pub mod constraint;
pub mod keyword;
pub mod number;
pub mod stage;
pub mod variable;
