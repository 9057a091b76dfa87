//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements     | Connects to                  |
//! |------------|----------------|------------------------------|
//! | `hardware` | ActuatorPort   | Drivetrain (LEDC PWM, GPIO)  |
//! |            | OneShotPort    | esp_timer one-shot           |
//! |            | SensorGatePort | Capture / line GPIO IRQs     |
//! | `link`     | LinkPort       | Link service channels        |
//! | `log_sink` | EventSink      | Serial log output            |

pub mod hardware;
pub mod link;
pub mod log_sink;
