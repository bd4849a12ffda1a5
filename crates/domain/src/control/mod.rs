mod descriptor;
mod reply;
mod template;
mod validator;
mod value;
mod value_domain;

pub use descriptor::{Access, ControlBuilder, ControlConfig, ControlDescriptor, PreparedWrite};
pub use reply::{parse_number, parse_reply, split_values};
pub use template::{CommandTemplate, SlotFormat};
pub use validator::{
    JoinedValidator, Validator, ValidatorKind, joined_validators, modular_range,
    strict_discrete_range, strict_discrete_set, strict_range, truncated_discrete_set,
    truncated_range,
};
pub use value::{ControlValue, ValueType, format_number};
pub use value_domain::ValueDomain;
