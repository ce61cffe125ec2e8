pub mod client;

pub use client::{
    CreateResponse, GatewayClient, ImageDatum, ImagesResponse, TaskOutput, TaskState,
    TaskStatusResponse,
};
