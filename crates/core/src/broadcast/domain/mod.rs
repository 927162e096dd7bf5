pub mod output_channel;
