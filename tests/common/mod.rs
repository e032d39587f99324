pub mod synthetic_skeleton;
