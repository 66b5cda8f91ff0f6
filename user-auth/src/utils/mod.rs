pub mod password;
pub mod validation;

pub use password::{
    hash_password, verify_password, Password, PasswordHashString, PASSWORD_POLICY_DESCRIPTION,
};
pub use validation::{case_insensitive, email_is_valid, ValidatedJson};
