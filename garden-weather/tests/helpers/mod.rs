#![allow(dead_code)]

pub mod fake_git;
pub mod garden;
