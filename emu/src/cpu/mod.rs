#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod alu;
pub mod arm;

#[allow(clippy::cast_lossless)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::module_name_repetitions)]
pub mod arm7tdmi;
pub mod condition;
pub mod cpu_modes;

#[allow(clippy::cast_possible_truncation)]
pub mod flags;
pub mod psr;
pub mod registers;
pub mod thumb;
pub mod trap;
