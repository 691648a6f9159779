mod dot;
mod driver;
mod kernel_args;
mod reduce;
