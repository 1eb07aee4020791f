mod compile;
mod targets;
