pub mod blendable;
