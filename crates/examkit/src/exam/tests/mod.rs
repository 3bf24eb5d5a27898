mod common;

mod selector;
mod session;
