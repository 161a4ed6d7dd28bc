mod support;

mod compile_order;
mod failures;
