mod offset;
mod validation;
