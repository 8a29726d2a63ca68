/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

// Connect to source file.
pub mod byte_order;
pub mod date_time;
pub mod fixed_name;
pub mod math;
pub mod quantities;

// Re-export.
pub use byte_order::*;
pub use date_time::*;
pub use fixed_name::*;
pub use math::*;
pub use quantities::*;
