pub mod args;

pub use args::{
    parse_page_list, parse_profile, parse_rotation_arg, parse_size, parse_stamp_arg, Args,
    StampArg,
};
