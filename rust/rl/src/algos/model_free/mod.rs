pub mod gradient_free;
